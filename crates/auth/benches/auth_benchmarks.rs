use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::{Duration, Utc};
use warden_auth::{
    Permission, PasswordHash, Role, TokenConfig, TokenService, User, effective_permissions, grants,
};
use warden_core::UserId;

fn token_service() -> TokenService {
    TokenService::new(TokenConfig::new(
        "benchmark-secret-key-0123456789abcdef",
        "warden-bench",
        Duration::hours(24),
    ))
    .unwrap()
}

/// A user with `role_count` roles of `perms_per_role` distinct permissions each.
fn user_with_grants(role_count: usize, perms_per_role: usize) -> User {
    let roles = (0..role_count)
        .map(|r| {
            Role::new(format!("role-{r}"), "").with_permissions(
                (0..perms_per_role)
                    .map(|p| Permission::new(format!("resource-{r}"), format!("action-{p}"), ""))
                    .collect(),
            )
        })
        .collect();

    User::new(
        "bench",
        "bench@example.com",
        PasswordHash::from_stored("unused"),
        "Bench User",
    )
    .with_roles(roles)
}

fn bench_token_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_token");
    let svc = token_service();
    let user_id = UserId::new();

    group.bench_function("issue", |b| {
        b.iter(|| svc.issue(black_box(user_id), black_box("bench@example.com")).unwrap())
    });

    let token = svc.issue(user_id, "bench@example.com").unwrap();
    let now = Utc::now();
    group.bench_function("verify", |b| {
        b.iter(|| svc.verify_at(black_box(&token), now).unwrap())
    });

    group.finish();
}

fn bench_permission_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("permission_resolution");

    for role_count in [1usize, 4, 16, 64].iter() {
        let user = user_with_grants(*role_count, 8);
        group.throughput(Throughput::Elements((*role_count * 8) as u64));

        // Worst case: the last permission of the last role, then a miss.
        let last_resource = format!("resource-{}", role_count - 1);
        group.bench_with_input(BenchmarkId::new("grants_hit", role_count), &user, |b, user| {
            b.iter(|| grants(black_box(user), &last_resource, "action-7"))
        });
        group.bench_with_input(BenchmarkId::new("grants_miss", role_count), &user, |b, user| {
            b.iter(|| grants(black_box(user), "users", "delete"))
        });
        group.bench_with_input(
            BenchmarkId::new("effective_permissions", role_count),
            &user,
            |b, user| b.iter(|| effective_permissions(black_box(user))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_token_round_trip, bench_permission_resolution);
criterion_main!(benches);
