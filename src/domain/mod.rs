mod phone_number;
mod quote;
mod subscriber;
mod subscriber_email;

pub use phone_number::{PhoneNumber, mask_phone};
pub use quote::{FALLBACK_QUOTE, Quote};
pub use subscriber::Subscriber;
pub use subscriber_email::SubscriberEmail;
