use polyref::proc::interface;

#[interface]
pub trait Metadata {
    fn kind() -> &'static str;
}

fn main() {}
