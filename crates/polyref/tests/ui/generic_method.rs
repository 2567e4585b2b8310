use polyref::proc::interface;

#[interface]
pub trait Convert {
    fn convert<U>(&self) -> U;
}

fn main() {}
