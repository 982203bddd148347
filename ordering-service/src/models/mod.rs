//! Models for ordering-service.

pub mod menu;
pub mod order;
pub mod payment;
pub mod table;

pub use menu::{MenuItem, StockScope};
pub use order::{NewOrder, NewOrderItem, Order, OrderDetails, OrderItem, OrderStatus};
pub use payment::{
    carry_remaining_payment, Payment, PaymentStatus, PaymentUpsert, RemainingPayment,
};
pub use table::{RestaurantTable, TableStatus};
