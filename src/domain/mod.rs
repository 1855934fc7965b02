mod entitlements;
mod message;
mod message_body;
mod password;
mod subscription_status;
mod tier;
mod user_email;

pub use entitlements::{Capabilities, Capability, Entitlements, ImageAllowance};
pub use message::{MessageKind, MessageSender};
pub use message_body::MessageBody;
pub use password::NewPassword;
pub use subscription_status::SubscriptionStatus;
pub use tier::Tier;
pub use user_email::UserEmail;
