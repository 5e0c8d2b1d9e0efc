pub mod codec;
pub mod location;
pub mod packet;
pub mod types;
pub mod value;
