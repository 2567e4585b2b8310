use polyref::proc::interface;

#[interface]
pub trait Consume {
    fn consume(self) -> u32;
}

fn main() {}
