mod id;
mod paced_sender;

pub use self::{
    id::{AppId, AppTimer},
    paced_sender::{ConfigError, PacedSender, SenderError, SenderState},
};
