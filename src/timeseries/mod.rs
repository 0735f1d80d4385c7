pub mod clock;
pub mod window;
pub mod windower;

pub use clock::{Clock, ManualClock, SystemClock};
pub use window::{last_complete_window, windows_between, Window, WindowError};
pub use windower::HistoricTumblingWindower;
