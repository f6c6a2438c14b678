pub mod dispatcher;
pub mod fcm;

pub use dispatcher::{DeliveryDispatcher, Dispatcher};
pub use fcm::FcmPushProvider;
