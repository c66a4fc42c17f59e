//control: the vibrator state machine and its duty configuration.
//Requests, timer expiry and deferred transitions all meet in the controller.
pub mod controller;
pub mod duty;
