// Copyright 2018 Steven Bosnick
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE-2.0 or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms

extern crate lexpat;

#[macro_use]
extern crate criterion;

use criterion::Criterion;
use lexpat::Pattern;

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("literal_alternation", |b| {
        b.iter(|| Pattern::new("if|else|while|for|return").unwrap())
    });

    c.bench_function("classic_dfa_blowup", |b| {
        b.iter(|| Pattern::new("(a|b)*a(a|b)(a|b)(a|b)").unwrap())
    });

    c.bench_function("identifier_and_number", |b| {
        b.iter(|| Pattern::new("[a-zA-Z_][a-zA-Z0-9_]*|[0-9]+(\\.[0-9]+)?").unwrap())
    });

    c.bench_function("utf8_non_ascii_plane", |b| {
        b.iter(|| {
            let frag = lexpat::utf8(0x80, 0x10ffff, true, None);
            Pattern::new(&frag).unwrap()
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
