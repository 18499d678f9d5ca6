pub mod silence_alarm;
