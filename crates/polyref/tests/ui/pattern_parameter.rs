use polyref::proc::interface;

#[interface]
pub trait Plot {
    fn plot(&self, (x, y): (f64, f64));
}

fn main() {}
