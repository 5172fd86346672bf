use criterion::{Criterion, criterion_group, criterion_main};

use permgate_core::appop::{AppOpDefaults, AppOpPolicies, MODE_ALLOWED, MODE_IGNORED};
use permgate_core::collection::IntSet;
use permgate_core::state::{PackageState, PermissionAllowlist, package_states};
use permgate_core::uri::{AppOpUri, PackageUri};
use permgate_core::{AccessPolicy, AccessState, AccessUri, GetStateScope, MutateStateScope};

const APP_OPS: [&str; 4] = ["CAMERA", "RECORD_AUDIO", "FINE_LOCATION", "WRITE_SETTINGS"];

fn make_state(policy: &AccessPolicy, package_count: usize) -> AccessState {
    let mut state = AccessState::new();
    let user_ids: IntSet = [0, 10].into_iter().collect();
    let packages = package_states(
        (0..package_count).map(|i| PackageState::new(format!("com.example.app{i}"), 10_000 + i as i32)),
    );
    policy.initialize(
        &mut state,
        &user_ids,
        packages,
        package_states([]),
        PermissionAllowlist::default(),
    );
    state
}

fn make_policy() -> (AccessPolicy, AppOpPolicies) {
    AccessPolicy::with_defaults(AppOpDefaults::new()).unwrap()
}

fn bench_get_decision_default(c: &mut Criterion) {
    let (policy, _) = make_policy();
    let state = make_state(&policy, 100);
    let subject = AccessUri::from(PackageUri::new("com.example.app42", 0));
    let object = AccessUri::from(AppOpUri::new("CAMERA"));

    c.bench_function("get_decision_default", |b| {
        b.iter(|| {
            policy
                .get_decision(&GetStateScope::new(&state), &subject, &object)
                .unwrap()
        });
    });
}

fn bench_get_decision_explicit(c: &mut Criterion) {
    let (policy, app_ops) = make_policy();
    let mut state = make_state(&policy, 100);
    let mut new_state = state.clone();
    {
        let mut scope = MutateStateScope::new(&state, &mut new_state);
        for i in 0..100 {
            let package_name = format!("com.example.app{i}");
            for app_op_name in APP_OPS {
                app_ops
                    .package
                    .set_app_op_mode(&mut scope, &package_name, 0, app_op_name, MODE_IGNORED)
                    .unwrap();
            }
        }
    }
    state = new_state;
    let subject = AccessUri::from(PackageUri::new("com.example.app42", 0));
    let object = AccessUri::from(AppOpUri::new("FINE_LOCATION"));

    c.bench_function("get_decision_explicit", |b| {
        b.iter(|| {
            policy
                .get_decision(&GetStateScope::new(&state), &subject, &object)
                .unwrap()
        });
    });
}

fn bench_set_decision_copy_on_write(c: &mut Criterion) {
    let (policy, _) = make_policy();
    let state = make_state(&policy, 100);
    let subject = AccessUri::from(PackageUri::new("com.example.app42", 0));
    let object = AccessUri::from(AppOpUri::new("CAMERA"));

    c.bench_function("set_decision_copy_on_write", |b| {
        b.iter(|| {
            let mut new_state = state.clone();
            let mut scope = MutateStateScope::new(&state, &mut new_state);
            policy
                .set_decision(&mut scope, &subject, &object, MODE_IGNORED)
                .unwrap();
            policy
                .set_decision(&mut scope, &subject, &object, MODE_ALLOWED)
                .unwrap();
        });
    });
}

fn bench_serialize_user_state(c: &mut Criterion) {
    let (policy, app_ops) = make_policy();
    let state = make_state(&policy, 200);
    let mut new_state = state.clone();
    {
        let mut scope = MutateStateScope::new(&state, &mut new_state);
        for i in 0..200 {
            let package_name = format!("com.example.app{i}");
            app_ops
                .package
                .set_app_op_mode(&mut scope, &package_name, 0, "CAMERA", MODE_IGNORED)
                .unwrap();
        }
    }
    let user_state = new_state.user_state(0).unwrap();

    c.bench_function("serialize_user_state_200_packages", |b| {
        b.iter(|| policy.serialize_user_state(0, user_state).unwrap());
    });
}

criterion_group!(
    benches,
    bench_get_decision_default,
    bench_get_decision_explicit,
    bench_set_decision_copy_on_write,
    bench_serialize_user_state,
);
criterion_main!(benches);
