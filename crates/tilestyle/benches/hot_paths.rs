use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tilestyle::{Combinator, Expression, compile_str, merge};

fn medium_stylesheet() -> String {
    let mut src = String::from(
        "version 8\nsource :osm, type: \"vector\", url: \"https://tiles.example/osm.json\", default: true\n",
    );
    for i in 0..50 {
        src.push_str(&format!(
            "layer :layer{i}, zoom: 5..18 {{\n\
               filter class == :c{i}\n\
               line_width {i}\n\
               line_color 0x{i:02x}{i:02x}{i:02x}\n\
               cascade kind == :bridge {{ line_opacity 0.5 }}\n\
               cascade kind == :tunnel {{ line_dasharray [2, 2] }}\n\
               on 12, highway == :primary {{ line_width {i} * 2 }}\n\
               on 14.. {{ line_width {i} * 3 }}\n\
             }}\n"
        ));
    }
    src
}

fn bench_merge_chain(c: &mut Criterion) {
    let conditions: Vec<Expression> = (0..100)
        .map(|i| Expression::get("kind").eq(i))
        .collect();

    c.bench_function("merge_chain_100", |b| {
        b.iter(|| {
            let mut iter = black_box(&conditions).iter().cloned();
            let first = iter.next().unwrap();
            iter.fold(first, |acc, c| merge(Combinator::All, acc, Some(c)))
                .encode()
        })
    });
}

fn bench_compile_stylesheet(c: &mut Criterion) {
    let src = medium_stylesheet();

    c.bench_function("compile_medium_stylesheet", |b| {
        b.iter(|| compile_str(black_box(&src)).unwrap())
    });
}

criterion_group!(benches, bench_merge_chain, bench_compile_stylesheet);
criterion_main!(benches);
