//! Tests for the declarative macro front-ends.

use polyref::{DynRef, DynRefMut, compose, define_interface};

define_interface! {
    /// A greeter with a receiver-less language query.
    pub trait Greeter {
        fn greet(&self) -> String;
        fn rename(&mut self, name: String);
        static fn language() -> &'static str;
    }
}

struct Person {
    name: String,
}

impl Greeter for Person {
    fn greet(&self) -> String {
        format!("hello, {}", self.name)
    }

    fn rename(&mut self, name: String) {
        self.name = name;
    }

    fn language() -> &'static str {
        "en"
    }
}

#[test]
fn test_declared_interface_dispatches() {
    let mut p = Person {
        name: "ada".to_string(),
    };
    let mut h = DynRefMut::<GreeterVt>::new(&mut p);
    assert_eq!(h.as_ref().greet(), "hello, ada");
    h.rename("grace".to_string());
    assert_eq!(h.as_ref().greet(), "hello, grace");
}

#[test]
fn test_static_fn_becomes_no_self() {
    let p = Person {
        name: "ada".to_string(),
    };
    let h = DynRef::<GreeterVt>::new(&p);
    assert_eq!(h.language(), "en");
}

define_interface! {
    pub trait Entity {
        fn entity_id(&self) -> u64;
        fn entity_kind(&self) -> &'static str;
    }

    pub trait Actor: Entity {
        fn act(&mut self) -> u64;
    }
}

struct Robot {
    id: u64,
    steps: u64,
}

impl Entity for Robot {
    fn entity_id(&self) -> u64 {
        self.id
    }

    fn entity_kind(&self) -> &'static str {
        "robot"
    }
}

impl Actor for Robot {
    fn act(&mut self) -> u64 {
        self.steps += 1;
        self.steps
    }
}

#[test]
fn test_supertrait_sugar_becomes_extends() {
    let mut r = Robot { id: 9, steps: 0 };
    let mut actor = DynRefMut::<ActorVt>::new(&mut r);
    assert_eq!(actor.act(), 1);
    assert_eq!(actor.act(), 2);

    // The supertrait in the declaration wires up upcasting.
    let entity = actor.upcast::<EntityVt>();
    assert_eq!(entity.as_ref().entity_id(), 9);
    assert_eq!(entity.as_ref().entity_kind(), "robot");
}

define_interface! {
    pub trait Volume {
        fn volume(&self) -> f64;
    }

    pub trait Weight {
        fn weight(&self) -> f64;
    }
}

struct Crate2 {
    side: f64,
    density: f64,
}

impl Volume for Crate2 {
    fn volume(&self) -> f64 {
        self.side * self.side * self.side
    }
}

impl Weight for Crate2 {
    fn weight(&self) -> f64 {
        self.volume() * self.density
    }
}

type VolumeAndWeight = compose!(VolumeVt, WeightVt);

#[test]
fn test_compose_macro_type_alias() {
    let c = Crate2 {
        side: 2.0,
        density: 0.5,
    };
    let both = DynRef::<VolumeAndWeight>::new(&c);
    assert_eq!(both.project::<VolumeVt, _>().volume(), 8.0);
    assert_eq!(both.project::<WeightVt, _>().weight(), 4.0);
}
