pub mod avatar;
pub mod model;
pub mod util;
