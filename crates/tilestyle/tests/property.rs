use proptest::prelude::*;
use serde_json::json;
use tilestyle::{ColorValue, Combinator, Expression, Stylesheet, Value, ValueMap, ZoomRange, merge};

fn arb_field() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("highway".to_string()),
        Just("kind".to_string()),
        Just("class".to_string()),
        "[a-z]{1,8}",
    ]
}

fn arb_condition() -> impl Strategy<Value = Expression> {
    (arb_field(), 0i64..100).prop_map(|(field, n)| Expression::get(&field).eq(n))
}

fn arb_combinator() -> impl Strategy<Value = Combinator> {
    prop_oneof![Just(Combinator::All), Just(Combinator::Any)]
}

fn compile_zoom(zoom: Value) -> serde_json::Map<String, serde_json::Value> {
    let mut options = ValueMap::new();
    options.insert("zoom".to_string(), zoom);
    let mut sheet = Stylesheet::new();
    sheet
        .layer("l", options, |l| l.set("line_width", 1))
        .unwrap();
    let doc = sheet.compile().unwrap();
    doc["layers"][0].as_object().unwrap().clone()
}

proptest! {
    #[test]
    fn merge_chains_stay_shallow(
        op in arb_combinator(),
        conditions in prop::collection::vec(arb_condition(), 3..12),
    ) {
        let deepest = conditions.iter().map(Expression::depth).max().unwrap();
        let mut iter = conditions.into_iter();
        let first = iter.next().unwrap();
        let merged = iter.fold(first, |acc, c| merge(op, acc, Some(c)));

        prop_assert!(merged.depth() <= deepest + 1);
        prop_assert_eq!(merged.operator(), Some(op.token()));
    }

    #[test]
    fn merge_keeps_every_operand(
        op in arb_combinator(),
        conditions in prop::collection::vec(arb_condition(), 2..12),
    ) {
        let n = conditions.len();
        let mut iter = conditions.into_iter();
        let first = iter.next().unwrap();
        let merged = iter.fold(first, |acc, c| merge(op, acc, Some(c)));
        prop_assert_eq!(merged.operands().len(), n);
    }

    #[test]
    fn scalar_zoom_sets_both_bounds(level in 0i64..24) {
        let layer = compile_zoom(Value::Int(level));
        prop_assert_eq!(&layer["minzoom"], &json!(level));
        prop_assert_eq!(&layer["maxzoom"], &json!(level));
    }

    #[test]
    fn one_sided_ranges_omit_the_other_bound(level in 0i64..24) {
        let from = compile_zoom(Value::Range(ZoomRange::from_level(level)));
        prop_assert_eq!(&from["minzoom"], &json!(level));
        prop_assert!(!from.contains_key("maxzoom"));

        let to = compile_zoom(Value::Range(ZoomRange::up_to(level)));
        prop_assert!(!to.contains_key("minzoom"));
        prop_assert_eq!(&to["maxzoom"], &json!(level));
    }

    #[test]
    fn color_ints_render_as_hex(n in 0i64..=0xff_ffff) {
        let mut sheet = Stylesheet::new();
        sheet
            .layer("l", ValueMap::new(), |l| l.set("line_color", n))
            .unwrap();
        let doc = sheet.compile().unwrap();
        let expected = format!("#{n:06x}");
        prop_assert_eq!(doc["layers"][0]["paint"]["line-color"].as_str(), Some(expected.as_str()));
        prop_assert_eq!(ColorValue::from_hex_int(n).unwrap().to_hex_string(), expected);
    }

    #[test]
    fn hsluv_round_trip_is_close(r in 0u8..=255, g in 0u8..=255, b in 0u8..=255) {
        let color = ColorValue::new(r, g, b);
        let [h, s, l] = color.to_hsluv();
        let back = ColorValue::from_hsluv(h, s / 100.0, l / 100.0);
        prop_assert!((i16::from(back.r) - i16::from(r)).abs() <= 1);
        prop_assert!((i16::from(back.g) - i16::from(g)).abs() <= 1);
        prop_assert!((i16::from(back.b) - i16::from(b)).abs() <= 1);
    }
}
