//! Customer handlers used by the chat front end.

mod get_customer;
mod register_customer;

pub use get_customer::GetCustomerHandler;
pub use register_customer::{
    RegisterCustomerCommand, RegisterCustomerHandler, RegisterCustomerResult,
};
