/// Environment key used to override `name` within `scope`, e.g. `HARNESS_CAPACITY_POWER`.
pub fn scoped_env_key(scope: &str, name: &str) -> String {
    format!("{}_{}", scope, name).to_uppercase().replace(['-', '.'], "_")
}
