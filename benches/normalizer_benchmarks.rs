use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mdx_language_server::normalizer::{normalize, RULES};

/// Generate README-style content of different patterns for benchmarking
fn generate_readme(sections: usize, pattern: &str) -> String {
    let mut content = String::new();

    match pattern {
        "plain_markdown" => {
            for i in 0..sections {
                content.push_str(&format!(
                    "## Section {}\n\nSome *text* with a [link](https://example.com/{}).\n\n- item\n- item\n\n",
                    i, i
                ));
            }
        }
        "html_heavy" => {
            for i in 0..sections {
                content.push_str(&format!(
                    "<!-- section {} -->\n<div align=\"center\">\n  <img src=\"img/{}.png\" align=\"right\" width=\"120\">\n  <p style=\"color: gray; margin-top: 4px\">Caption&nbsp;{}</p>\n</div>\n\n",
                    i, i, i
                ));
            }
        }
        "unbalanced" => {
            for i in 0..sections {
                match i % 3 {
                    0 => content.push_str("<div>\n\nopen\n\n"),
                    1 => content.push_str("</div>\n\n</div>\n\n"),
                    _ => content.push_str(&format!("<div align=\"left\">{}\n\n", i)),
                }
            }
        }
        _ => {
            for i in 0..sections {
                content.push_str(&format!("Paragraph {}\n\n", i));
            }
        }
    }

    content
}

/// Benchmark each rule on its own
fn bench_rules(c: &mut Criterion) {
    let content = generate_readme(200, "html_heavy");
    let mut group = c.benchmark_group("rules");

    for rule in RULES {
        group.bench_with_input(BenchmarkId::new("rule", rule.name), &content, |b, content| {
            b.iter(|| black_box((rule.apply)(black_box(content))))
        });
    }

    group.finish();
}

/// Benchmark the full pipeline over documents of different sizes
fn bench_normalize(c: &mut Criterion) {
    let sizes = vec![10, 100, 1_000];
    let patterns = vec!["plain_markdown", "html_heavy", "unbalanced"];

    let mut group = c.benchmark_group("normalize");

    for &size in &sizes {
        for pattern in &patterns {
            let content = generate_readme(size, pattern);

            group.throughput(Throughput::Bytes(content.len() as u64));
            group.bench_with_input(
                BenchmarkId::new(*pattern, size),
                &content,
                |b, content| b.iter(|| black_box(normalize(black_box(content)))),
            );
        }
    }

    group.finish();
}

/// Benchmark the README fixture
fn bench_fixture(c: &mut Criterion) {
    let content = include_str!("../tests/fixtures/github_readme.md");
    let mut group = c.benchmark_group("fixture");

    group.throughput(Throughput::Bytes(content.len() as u64));
    group.bench_function("github_readme", |b| {
        b.iter(|| black_box(normalize(black_box(content))))
    });

    group.finish();
}

criterion_group!(benches, bench_rules, bench_normalize, bench_fixture);
criterion_main!(benches);
