pub mod path_stack;
pub mod prefix;
pub mod u8_keys;
