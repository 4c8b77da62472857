use criterion::*;
use focus_auth::{Authority, AuthorityOptions};

fn criterion_benchmark(c: &mut Criterion) {
    let authority = Authority::new(AuthorityOptions::new(
        "https://idp.example.net/auth?token=%s",
    ))
    .unwrap();

    // The full browser round trip minus the browser: issue a token, redeem
    // it. Redeeming keeps the token table from growing across iterations.
    c.bench_function("issue_and_authenticate", |b| {
        b.iter(|| {
            let url = authority.issue_url("room1@conf.example.net/alice", "room1");
            let token = url.rsplit_once("token=").map(|(_, t)| t.to_string()).unwrap();

            authority.authenticate(&token, "alice@idp")
        })
    });

    c.bench_function("is_user_authenticated", |b| {
        b.iter(|| authority.is_user_authenticated("room1@conf.example.net/alice", "room1"))
    });

    c.bench_function("is_allowed_to_create_room", |b| {
        b.iter(|| authority.is_allowed_to_create_room("room1@conf.example.net/alice", "room1"))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
