use polyref::proc::interface;

#[interface]
pub trait Container<T> {
    fn get(&self) -> T;
}

fn main() {}
