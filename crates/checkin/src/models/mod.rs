mod event;
mod pool;
mod session;
mod ticket;
mod validation;

pub use event::*;
pub use pool::*;
pub use session::*;
pub use ticket::*;
pub use validation::*;
