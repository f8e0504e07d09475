pub mod audit_logs;
pub mod blogs;
pub mod collections;
pub mod contact_messages;
pub mod orders;
pub mod products;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use blogs::Entity as Blogs;
pub use collections::Entity as Collections;
pub use contact_messages::Entity as ContactMessages;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use users::Entity as Users;
