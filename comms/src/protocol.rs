pub type Header = u32;
pub const HEADER_SIZE: usize = size_of::<Header>();

pub const ERR: Header = 0;
pub const CONTROL: Header = 1;
pub const GRAD: Header = 2;
pub const PARAMS: Header = 3;
