//! Placeholder assets for degraded mode.
//!
//! When no provider key is configured and the local resize also fails, the
//! pipeline substitutes one of these images so the request still completes.
//! The PNGs are compiled into the binary, so resolving one can never fail.
//! The pipeline labels the substituted bytes with the source's media type.

/// A built-in placeholder image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockAsset {
    /// Short name used in logs and reports.
    pub name: &'static str,
    /// Path the asset is served under by a web front end.
    pub url: &'static str,
    /// PNG bytes.
    pub bytes: &'static [u8],
}

const UPSCALED_2X: MockAsset = MockAsset {
    name: "upscaled-2x",
    url: "/mock/upscaled-2x.png",
    bytes: include_bytes!("../assets/mock/upscaled-2x.png"),
};

const UPSCALED_4X: MockAsset = MockAsset {
    name: "upscaled-4x",
    url: "/mock/upscaled-4x.png",
    bytes: include_bytes!("../assets/mock/upscaled-4x.png"),
};

const PLACEHOLDER: MockAsset = MockAsset {
    name: "upscaled-placeholder",
    url: "/mock/upscaled-placeholder.png",
    bytes: include_bytes!("../assets/mock/upscaled-placeholder.png"),
};

/// Maps an upscale factor to its placeholder asset.
#[derive(Debug, Clone)]
pub struct MockResolver {
    by_factor: Vec<(u32, MockAsset)>,
    fallback: MockAsset,
}

impl MockResolver {
    /// Resolver over the assets shipped with the binary.
    pub fn builtin() -> Self {
        Self {
            by_factor: vec![(2, UPSCALED_2X), (4, UPSCALED_4X)],
            fallback: PLACEHOLDER,
        }
    }

    /// Asset for `factor`, or the generic placeholder for unknown factors.
    pub fn resolve(&self, factor: u32) -> MockAsset {
        self.by_factor
            .iter()
            .find(|(f, _)| *f == factor)
            .map_or(self.fallback, |(_, asset)| *asset)
    }
}

impl Default for MockResolver {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_factors_resolve_to_their_assets() {
        let resolver = MockResolver::builtin();
        assert_eq!(resolver.resolve(2).url, "/mock/upscaled-2x.png");
        assert_eq!(resolver.resolve(4).url, "/mock/upscaled-4x.png");
    }

    #[test]
    fn unknown_factor_uses_generic_placeholder() {
        let resolver = MockResolver::builtin();
        assert_eq!(resolver.resolve(3).name, "upscaled-placeholder");
        assert_eq!(resolver.resolve(0).name, "upscaled-placeholder");
    }

    #[test]
    fn builtin_assets_are_decodable_pngs() {
        let resolver = MockResolver::builtin();
        for factor in [2, 4, 8] {
            let asset = resolver.resolve(factor);
            assert_eq!(
                image::guess_format(asset.bytes).unwrap(),
                image::ImageFormat::Png,
                "{}",
                asset.name
            );
            assert!(image::load_from_memory(asset.bytes).is_ok(), "{}", asset.name);
        }
    }
}
