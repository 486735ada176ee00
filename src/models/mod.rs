pub mod article;
pub mod review;
pub mod submission;
pub mod user;

pub use article::*;
pub use review::*;
pub use submission::*;
pub use user::*;
