mod conditions;
mod eager;
mod entities;
mod flaky;
mod operations;
mod orders;
mod properties;
mod reactive;

pub use conditions::*;
pub use eager::*;
pub use entities::*;
pub use flaky::*;
pub use operations::*;
pub use orders::*;
pub use properties::*;
pub use reactive::*;

pub fn init_logs() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}
