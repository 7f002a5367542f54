pub use super::image_tags::Entity as ImageTags;
pub use super::images::Entity as Images;
pub use super::partitions::Entity as Partitions;
pub use super::random_sessions::Entity as RandomSessions;
pub use super::tags::Entity as Tags;
