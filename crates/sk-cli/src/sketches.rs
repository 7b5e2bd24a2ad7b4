//! Sketches bundled with the binary, addressable as `@name`.

pub const BUILTIN: &[(&str, &str)] = &[
    (
        "animated-rectangle",
        include_str!("../sketches/animated_rectangle.js"),
    ),
    ("brownian-motion", include_str!("../sketches/brownian_motion.js")),
];

pub fn find(name: &str) -> Option<&'static str> {
    BUILTIN
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, source)| *source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sk_core::Evaluator;

    #[test]
    fn every_bundled_sketch_loads() {
        for (name, source) in BUILTIN {
            let loaded = Evaluator::new().load(source);
            assert!(loaded.is_ok(), "{name}: {:?}", loaded.err());
        }
        assert!(find("brownian-motion").is_some());
        assert!(find("spirograph").is_none());
    }
}
