//! Property-based tests for framekit-lib
//!
//! These tests use proptest to verify invariants across a wide range of inputs.

#[cfg(test)]
mod config_properties {
    use framekit_lib::config::is_valid_name;
    use framekit_lib::{ConfigError, FrameConfiguration, FrameServiceOptions};
    use proptest::prelude::*;

    fn options(name: &str) -> FrameServiceOptions {
        FrameServiceOptions::new(
            name,
            "https://assets.example.com/dispatch.html",
            "https://assets.example.com/landing.html",
        )
    }

    proptest! {
        /// Word-character names are always accepted
        #[test]
        fn word_names_accepted(name in "[A-Za-z0-9_]{1,32}") {
            prop_assert!(is_valid_name(&name));
            let config = FrameConfiguration::try_from(options(&name));
            prop_assert!(config.is_ok());
        }

        /// Any other character makes the name invalid
        #[test]
        fn non_word_names_rejected(
            prefix in "[A-Za-z0-9_]{0,8}",
            bad in "[^A-Za-z0-9_\\s]",
            suffix in "[A-Za-z0-9_]{0,8}"
        ) {
            let name = format!("{}{}{}", prefix, bad, suffix);
            let result = FrameConfiguration::try_from(options(&name));
            let is_invalid_name = matches!(result, Err(ConfigError::InvalidName { .. }));
            prop_assert!(is_invalid_name);
        }

        /// Only http and https frame URLs are accepted
        #[test]
        fn frame_urls_require_http_scheme(
            scheme in "(javascript|data|mailto|file|ftp|blob|about)",
            rest in "[a-z0-9/.,]{1,16}"
        ) {
            let mut opts = options("checkout");
            opts.dispatch_frame_url = Some(format!("{}:{}", scheme, rest));
            let result = FrameConfiguration::try_from(opts);
            let is_invalid_url = matches!(
                result,
                Err(ConfigError::InvalidUrl { field: "dispatchFrameUrl", .. })
            );
            prop_assert!(is_invalid_url);
        }

        /// Positive dimensions are kept, non-positive ones rejected
        #[test]
        fn dimensions_must_be_positive(height in -1000i64..1000i64) {
            let mut opts = options("checkout");
            opts.height = Some(height);
            let result = FrameConfiguration::try_from(opts);
            if height > 0 {
                prop_assert_eq!(result.map(|c| c.popup().height), Ok(height as u32));
            } else {
                let is_invalid_dimension =
                    matches!(result, Err(ConfigError::InvalidDimension { field: "height", .. }));
                prop_assert!(is_invalid_dimension);
            }
        }
    }
}

#[cfg(test)]
mod channel_properties {
    use framekit_lib::ChannelId;
    use proptest::prelude::*;

    proptest! {
        /// The channel survives being embedded in any valid window name
        #[test]
        fn channel_recovered_from_window_name(name in "[A-Za-z0-9_]{1,32}") {
            let channel = ChannelId::generate();
            let window_name = channel.popup_window_name(&name);
            prop_assert_eq!(ChannelId::from_window_name(&window_name), Some(channel.clone()));
            prop_assert_eq!(
                ChannelId::from_dispatch_frame_name(&channel.dispatch_frame_name()),
                Some(channel)
            );
        }
    }
}

#[cfg(test)]
mod popup_properties {
    use framekit_lib::popup::{popup_features, HostGeometry};
    use framekit_lib::PopupOptions;
    use proptest::prelude::*;

    proptest! {
        /// A centered popup sits in the middle of the host window
        #[test]
        fn centered_popup_is_centered(
            width in 400.0f64..4000.0,
            height in 400.0f64..3000.0,
            x in -2000.0f64..2000.0,
            y in 0.0f64..1000.0
        ) {
            let geometry = HostGeometry {
                outer_width: Some(width),
                outer_height: Some(height),
                screen_x: x,
                screen_y: y,
                client_width: 0.0,
                client_height: 0.0,
            };
            let options = PopupOptions::default();
            let features = popup_features(&options, &geometry);

            let field = |key: &str| -> i64 {
                features
                    .split(',')
                    .find_map(|part| part.strip_prefix(key))
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(i64::MIN)
            };
            let top = field("top=") as f64;
            let left = field("left=") as f64;
            let expected_top = height / 2.0 - options.height as f64 / 2.0 + y;
            let expected_left = width / 2.0 - options.width as f64 / 2.0 + x;
            prop_assert!((top - expected_top).abs() <= 0.5);
            prop_assert!((left - expected_left).abs() <= 0.5);
        }
    }
}

#[cfg(test)]
mod query_properties {
    use framekit_lib::query;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    proptest! {
        /// Appending parameters to a URL and parsing them back is lossless
        #[test]
        fn queryify_then_parse(params in prop::collection::btree_map("[a-z]{1,8}", ".{0,16}", 0..6)) {
            let params: BTreeMap<String, String> = params;
            let url = query::queryify("https://assets.example.com/redirect.html", &params);
            prop_assert_eq!(query::parse(&url), params);
        }
    }
}
