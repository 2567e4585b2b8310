use polyref::proc::interface;

#[interface]
pub trait Metadata {
    #[no_self]
    fn kind(&self) -> &'static str;
}

fn main() {}
