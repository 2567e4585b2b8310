use polyref::proc::interface;

#[interface]
pub trait Fetch {
    async fn fetch(&self) -> u32;
}

fn main() {}
