pub(crate) mod auto_wake;
pub(crate) mod charge_task;
pub(crate) mod fuel_gauge;
pub(crate) mod led_blinker;
pub(crate) mod power_key;
pub(crate) mod watchdog_feeder;
