//! Pricing oracle: pure, deterministic catalog lookups.
//!
//! Every monthly figure in the engine funnels through here so the detection
//! rules, the executor and the drift simulation agree on what a resource
//! costs. All functions are pure; nothing here touches the store.

/// Billing month used everywhere a monthly figure is derived from an hourly rate
pub const HOURS_PER_MONTH: f64 = 720.0;

/// Fallback hourly rate for instance types missing from the catalog
pub const FALLBACK_HOURLY_RATE: f64 = 0.10;

// Block storage, $/GiB-month
pub const GP2_GIB_MONTH: f64 = 0.10;
pub const GP3_GIB_MONTH: f64 = 0.08;
pub const IO1_GIB_MONTH: f64 = 0.125;
pub const IO2_GIB_MONTH: f64 = 0.125;
pub const ST1_GIB_MONTH: f64 = 0.045;
pub const SC1_GIB_MONTH: f64 = 0.015;
pub const SNAPSHOT_GIB_MONTH: f64 = 0.05;

// Object storage tiers, $/GiB-month
pub const S3_STANDARD_GIB_MONTH: f64 = 0.023;
pub const S3_IA_GIB_MONTH: f64 = 0.0125;
pub const S3_GLACIER_GIB_MONTH: f64 = 0.004;

// Log storage and ingestion
pub const LOG_STORAGE_GIB_MONTH: f64 = 0.03;
pub const LOG_INGESTION_PER_GIB: f64 = 0.50;

/// Unassociated floating IPs bill hourly
pub const EIP_HOURLY_RATE: f64 = 0.005;

/// Lambda GB-second rate
pub const LAMBDA_GB_SECOND: f64 = 0.0000166667;

// Assumed monthly figures where the inventory carries no usage signal
pub const ASSUMED_LOG_GROUP_MONTHLY: f64 = 0.30;
pub const ASSUMED_VERSIONING_OVERHEAD_MONTHLY: f64 = 1.15;
pub const ASSUMED_LAMBDA_IDLE_MONTHLY: f64 = 0.50;
pub const S3_DEFAULT_ASSUMED_GIB: f64 = 100.0;

/// Load balancer hourly base + per-LCU rate
pub const LB_HOURLY_BASE: f64 = 0.0225;
pub const LB_LCU_HOURLY: f64 = 0.008;

/// Compute instance catalog: (type, $/hour)
const INSTANCE_CATALOG: &[(&str, f64)] = &[
    ("t3.micro", 0.0104),
    ("t3.small", 0.0208),
    ("t3.medium", 0.0416),
    ("t3.large", 0.0832),
    ("t3.xlarge", 0.1664),
    ("m5.large", 0.096),
    ("m5.xlarge", 0.192),
    ("m5.2xlarge", 0.384),
    ("c5.large", 0.085),
    ("c5.xlarge", 0.17),
    ("r5.large", 0.126),
    ("r5.xlarge", 0.252),
];

/// Managed database catalog: (class, $/hour)
const RDS_CATALOG: &[(&str, f64)] = &[
    ("db.t3.micro", 0.017),
    ("db.t3.small", 0.034),
    ("db.t3.medium", 0.068),
    ("db.t3.large", 0.136),
    ("db.t3.xlarge", 0.272),
    ("db.m5.large", 0.171),
    ("db.r5.large", 0.24),
];

/// Fixed downsize ladder for managed databases, largest to smallest
pub const RDS_DOWNSIZE_LADDER: &[&str] =
    &["db.t3.xlarge", "db.t3.large", "db.t3.medium", "db.t3.small", "db.t3.micro"];

/// Cache node catalog: (node type, $/hour per node)
const CACHE_CATALOG: &[(&str, f64)] = &[
    ("cache.t3.micro", 0.017),
    ("cache.t3.small", 0.034),
    ("cache.t3.medium", 0.068),
    ("cache.m5.large", 0.156),
    ("cache.r5.large", 0.216),
];

/// Family sibling ladders, smallest first; rightsizing walks one step left.
const FAMILY_LADDERS: &[&[&str]] = &[
    &["t3.micro", "t3.small", "t3.medium", "t3.large", "t3.xlarge"],
    &["m5.large", "m5.xlarge", "m5.2xlarge"],
    &["c5.large", "c5.xlarge"],
    &["r5.large", "r5.xlarge"],
];

pub fn instance_hourly_cost(instance_type: &str) -> f64 {
    INSTANCE_CATALOG
        .iter()
        .find(|(t, _)| *t == instance_type)
        .map(|(_, rate)| *rate)
        .unwrap_or(FALLBACK_HOURLY_RATE)
}

pub fn instance_monthly_cost(instance_type: &str) -> f64 {
    instance_hourly_cost(instance_type) * HOURS_PER_MONTH
}

pub fn rds_monthly_cost(instance_class: &str) -> f64 {
    RDS_CATALOG
        .iter()
        .find(|(c, _)| *c == instance_class)
        .map(|(_, rate)| *rate)
        .unwrap_or(FALLBACK_HOURLY_RATE)
        * HOURS_PER_MONTH
}

pub fn cache_monthly_cost(node_type: &str, num_nodes: i64) -> f64 {
    let rate = CACHE_CATALOG
        .iter()
        .find(|(t, _)| *t == node_type)
        .map(|(_, r)| *r)
        .unwrap_or(FALLBACK_HOURLY_RATE);
    rate * HOURS_PER_MONTH * num_nodes.max(1) as f64
}

/// Base hourly charge plus the consumed-capacity-unit charge
pub fn lb_monthly_cost(lcu: f64) -> f64 {
    (LB_HOURLY_BASE + LB_LCU_HOURLY * lcu.max(0.0)) * HOURS_PER_MONTH
}

pub fn volume_monthly_cost(volume_type: &str, size_gib: i64) -> f64 {
    let per_gib = match volume_type {
        "gp2" => GP2_GIB_MONTH,
        "gp3" => GP3_GIB_MONTH,
        "io1" => IO1_GIB_MONTH,
        "io2" => IO2_GIB_MONTH,
        "st1" => ST1_GIB_MONTH,
        "sc1" => SC1_GIB_MONTH,
        _ => GP3_GIB_MONTH,
    };
    per_gib * size_gib.max(0) as f64
}

pub fn snapshot_monthly_cost(size_gib: i64) -> f64 {
    SNAPSHOT_GIB_MONTH * size_gib.max(0) as f64
}

pub fn unattached_eip_monthly_cost() -> f64 {
    EIP_HOURLY_RATE * HOURS_PER_MONTH
}

/// Assumed savings when Standard-tier data is tiered to IA + Glacier under a
/// 30/90-day lifecycle rule: roughly half the data stays hot, 30% lands in
/// IA and 20% in Glacier.
pub fn s3_tiering_savings(size_gib: f64) -> f64 {
    let blended =
        0.5 * S3_STANDARD_GIB_MONTH + 0.3 * S3_IA_GIB_MONTH + 0.2 * S3_GLACIER_GIB_MONTH;
    ((S3_STANDARD_GIB_MONTH - blended) * size_gib.max(0.0) * 10_000.0).trunc() / 10_000.0
}

/// GB-second billing
pub fn lambda_monthly_cost(memory_mb: i64, avg_duration_ms: f64, invocations_per_month: f64) -> f64 {
    let gb = memory_mb.max(0) as f64 / 1024.0;
    let seconds = avg_duration_ms.max(0.0) / 1000.0;
    gb * seconds * invocations_per_month.max(0.0) * LAMBDA_GB_SECOND
}

/// One step down the family sibling list; None when already smallest or the
/// type is not in any catalog family.
pub fn recommended_smaller_instance(instance_type: &str) -> Option<&'static str> {
    for ladder in FAMILY_LADDERS {
        if let Some(pos) = ladder.iter().position(|t| *t == instance_type) {
            return if pos > 0 { Some(ladder[pos - 1]) } else { None };
        }
    }
    None
}

/// One step down the RDS ladder; None at the floor.
pub fn next_smaller_rds_class(instance_class: &str) -> Option<&'static str> {
    let pos = RDS_DOWNSIZE_LADDER.iter().position(|c| *c == instance_class)?;
    RDS_DOWNSIZE_LADDER.get(pos + 1).copied()
}

/// Truncate dollars to 4 decimal places for stable wire output
pub fn truncate_dollars(amount: f64) -> f64 {
    (amount * 10_000.0).trunc() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_instance_monthly_cost() {
        let t3_small = instance_monthly_cost("t3.small");
        assert!((t3_small - 14.976).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_instance_falls_back() {
        assert!((instance_monthly_cost("z9.mega") - 72.0).abs() < 1e-9);
    }

    #[test]
    fn test_gp2_to_gp3_savings() {
        let gp2 = volume_monthly_cost("gp2", 500);
        let gp3 = volume_monthly_cost("gp3", 500);
        assert!((gp2 - 50.0).abs() < 1e-9);
        assert!((gp3 - 40.0).abs() < 1e-9);
        assert!((gp2 - gp3 - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_cost() {
        assert!((snapshot_monthly_cost(100) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_eip_cost() {
        assert!((unattached_eip_monthly_cost() - 3.6).abs() < 1e-9);
    }

    #[test]
    fn test_smaller_sibling_walks_one_step() {
        assert_eq!(recommended_smaller_instance("t3.large"), Some("t3.medium"));
        assert_eq!(recommended_smaller_instance("m5.2xlarge"), Some("m5.xlarge"));
        assert_eq!(recommended_smaller_instance("t3.micro"), None);
        assert_eq!(recommended_smaller_instance("unknown.type"), None);
    }

    #[test]
    fn test_rds_ladder_floor() {
        assert_eq!(next_smaller_rds_class("db.t3.medium"), Some("db.t3.small"));
        assert_eq!(next_smaller_rds_class("db.t3.micro"), None);
    }

    #[test]
    fn test_lambda_gb_second_billing() {
        // 1 GiB * 1 s * 1M invocations = 1M GB-seconds
        let cost = lambda_monthly_cost(1024, 1000.0, 1_000_000.0);
        assert!((cost - 16.6667).abs() < 1e-3);
    }

    #[test]
    fn test_tiering_savings_positive_and_below_standard() {
        let savings = s3_tiering_savings(100.0);
        assert!(savings > 0.0);
        assert!(savings < S3_STANDARD_GIB_MONTH * 100.0);
    }

    #[test]
    fn test_truncate_dollars() {
        assert_eq!(truncate_dollars(13.478455), 13.4784);
        assert_eq!(truncate_dollars(10.0), 10.0);
    }
}
