pub mod api;
pub mod avatar;
pub mod client;
pub mod config;
pub mod model;
pub mod store;
pub mod sync;
pub mod ui;
pub mod view_state;

pub use api::{
    HttpApi,
    LeaderboardApi,
};
pub use store::{
    Notice,
    Store,
    ValidationError,
};
pub use view_state::{
    Field,
    StalePolicy,
    ViewState,
};
