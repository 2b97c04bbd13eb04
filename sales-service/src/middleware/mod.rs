pub mod user_id;

pub use user_id::{ActingUser, USER_ID_HEADER};
