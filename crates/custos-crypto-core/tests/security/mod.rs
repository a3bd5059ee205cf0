mod failure_hygiene;
mod timing_sidechannel;
