mod config_boot;
mod end_to_end;
mod hydration;
