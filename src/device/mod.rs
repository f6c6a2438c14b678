pub mod device_dto;
pub mod device_handlers;
pub mod device_models;
pub mod device_service;

pub use device_models::DeviceEndpoint;
pub use device_service::DeviceService;
