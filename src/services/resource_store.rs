//! Table-oriented access to the simulated cloud inventory.
//!
//! The store exposes per-table reads, primary-or-natural-key lookups and
//! narrow field mutations. Per-row atomicity only; no cross-table
//! transactions are required by callers.

use crate::models::{
    AutoscalingGroup, CacheCluster, ElasticIp, Instance, LambdaFunction, LifecycleRule,
    LoadBalancer, LogGroup, RdsInstance, S3Bucket, Snapshot, Volume,
};
use crate::utils::ApiResult;
use sqlx::SqlitePool;
use sqlx::types::Json;

#[derive(Clone)]
pub struct ResourceStore {
    pool: SqlitePool,
}

impl ResourceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Snapshot reads (one per table; the detection engine fans these out)
    // ------------------------------------------------------------------

    pub async fn list_instances(&self) -> ApiResult<Vec<Instance>> {
        Ok(sqlx::query_as("SELECT * FROM instances").fetch_all(&self.pool).await?)
    }

    pub async fn list_autoscaling_groups(&self) -> ApiResult<Vec<AutoscalingGroup>> {
        Ok(sqlx::query_as("SELECT * FROM autoscaling_groups").fetch_all(&self.pool).await?)
    }

    pub async fn list_rds_instances(&self) -> ApiResult<Vec<RdsInstance>> {
        Ok(sqlx::query_as("SELECT * FROM rds_instances").fetch_all(&self.pool).await?)
    }

    pub async fn list_cache_clusters(&self) -> ApiResult<Vec<CacheCluster>> {
        Ok(sqlx::query_as("SELECT * FROM cache_clusters").fetch_all(&self.pool).await?)
    }

    pub async fn list_load_balancers(&self) -> ApiResult<Vec<LoadBalancer>> {
        Ok(sqlx::query_as("SELECT * FROM load_balancers").fetch_all(&self.pool).await?)
    }

    pub async fn list_lambda_functions(&self) -> ApiResult<Vec<LambdaFunction>> {
        Ok(sqlx::query_as("SELECT * FROM lambda_functions").fetch_all(&self.pool).await?)
    }

    pub async fn list_volumes(&self) -> ApiResult<Vec<Volume>> {
        Ok(sqlx::query_as("SELECT * FROM volumes").fetch_all(&self.pool).await?)
    }

    pub async fn list_snapshots(&self) -> ApiResult<Vec<Snapshot>> {
        Ok(sqlx::query_as("SELECT * FROM snapshots").fetch_all(&self.pool).await?)
    }

    pub async fn list_s3_buckets(&self) -> ApiResult<Vec<S3Bucket>> {
        Ok(sqlx::query_as("SELECT * FROM s3_buckets").fetch_all(&self.pool).await?)
    }

    pub async fn list_log_groups(&self) -> ApiResult<Vec<LogGroup>> {
        Ok(sqlx::query_as("SELECT * FROM log_groups").fetch_all(&self.pool).await?)
    }

    pub async fn list_elastic_ips(&self) -> ApiResult<Vec<ElasticIp>> {
        Ok(sqlx::query_as("SELECT * FROM elastic_ips").fetch_all(&self.pool).await?)
    }

    /// Every account that owns at least one resource
    pub async fn list_account_ids(&self) -> ApiResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT account_id FROM instances
             UNION SELECT account_id FROM autoscaling_groups
             UNION SELECT account_id FROM rds_instances
             UNION SELECT account_id FROM cache_clusters
             UNION SELECT account_id FROM load_balancers
             UNION SELECT account_id FROM lambda_functions
             UNION SELECT account_id FROM volumes
             UNION SELECT account_id FROM snapshots
             UNION SELECT account_id FROM s3_buckets
             UNION SELECT account_id FROM log_groups
             UNION SELECT account_id FROM elastic_ips
             ORDER BY account_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(a,)| a).collect())
    }

    // ------------------------------------------------------------------
    // Per-account reads (drift tick)
    // ------------------------------------------------------------------

    pub async fn list_instances_by_account(&self, account_id: &str) -> ApiResult<Vec<Instance>> {
        Ok(sqlx::query_as("SELECT * FROM instances WHERE account_id = ?")
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn list_autoscaling_groups_by_account(
        &self,
        account_id: &str,
    ) -> ApiResult<Vec<AutoscalingGroup>> {
        Ok(sqlx::query_as("SELECT * FROM autoscaling_groups WHERE account_id = ?")
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn list_s3_buckets_by_account(&self, account_id: &str) -> ApiResult<Vec<S3Bucket>> {
        Ok(sqlx::query_as("SELECT * FROM s3_buckets WHERE account_id = ?")
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn list_log_groups_by_account(&self, account_id: &str) -> ApiResult<Vec<LogGroup>> {
        Ok(sqlx::query_as("SELECT * FROM log_groups WHERE account_id = ?")
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn list_elastic_ips_by_account(&self, account_id: &str) -> ApiResult<Vec<ElasticIp>> {
        Ok(sqlx::query_as("SELECT * FROM elastic_ips WHERE account_id = ?")
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?)
    }

    // ------------------------------------------------------------------
    // Primary-or-natural-key lookups (executor)
    //
    // Callers pass either the store-assigned row id or the human-meaningful
    // identifier; the primary key is attempted first.
    // ------------------------------------------------------------------

    pub async fn get_instance(&self, key: &str) -> ApiResult<Option<Instance>> {
        self.get_by_pk_or_natural("instances", "instance_id", key).await
    }

    pub async fn get_autoscaling_group(&self, key: &str) -> ApiResult<Option<AutoscalingGroup>> {
        self.get_by_pk_or_natural("autoscaling_groups", "name", key).await
    }

    pub async fn get_rds_instance(&self, key: &str) -> ApiResult<Option<RdsInstance>> {
        self.get_by_pk_or_natural("rds_instances", "db_instance_id", key).await
    }

    pub async fn get_cache_cluster(&self, key: &str) -> ApiResult<Option<CacheCluster>> {
        self.get_by_pk_or_natural("cache_clusters", "cluster_id", key).await
    }

    pub async fn get_load_balancer(&self, key: &str) -> ApiResult<Option<LoadBalancer>> {
        self.get_by_pk_or_natural("load_balancers", "lb_arn", key).await
    }

    pub async fn get_lambda_function(&self, key: &str) -> ApiResult<Option<LambdaFunction>> {
        self.get_by_pk_or_natural("lambda_functions", "name", key).await
    }

    pub async fn get_volume(&self, key: &str) -> ApiResult<Option<Volume>> {
        self.get_by_pk_or_natural("volumes", "volume_id", key).await
    }

    pub async fn get_snapshot(&self, key: &str) -> ApiResult<Option<Snapshot>> {
        self.get_by_pk_or_natural("snapshots", "snapshot_id", key).await
    }

    pub async fn get_s3_bucket(&self, key: &str) -> ApiResult<Option<S3Bucket>> {
        self.get_by_pk_or_natural("s3_buckets", "name", key).await
    }

    pub async fn get_log_group(&self, key: &str) -> ApiResult<Option<LogGroup>> {
        self.get_by_pk_or_natural("log_groups", "name", key).await
    }

    pub async fn get_elastic_ip(&self, key: &str) -> ApiResult<Option<ElasticIp>> {
        self.get_by_pk_or_natural("elastic_ips", "allocation_id", key).await
    }

    async fn get_by_pk_or_natural<T>(
        &self,
        table: &str,
        natural_field: &str,
        key: &str,
    ) -> ApiResult<Option<T>>
    where
        T: for<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> + Send + Unpin,
    {
        let by_pk: Option<T> = sqlx::query_as(&format!("SELECT * FROM {} WHERE id = ?", table))
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        if by_pk.is_some() {
            return Ok(by_pk);
        }

        Ok(sqlx::query_as(&format!(
            "SELECT * FROM {} WHERE {} = ? LIMIT 1",
            table, natural_field
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?)
    }

    // ------------------------------------------------------------------
    // Field mutations (executor handlers); all bump updated_at
    // ------------------------------------------------------------------

    pub async fn update_instance_state(&self, row_id: &str, state: &str) -> ApiResult<()> {
        sqlx::query("UPDATE instances SET state = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(state)
            .bind(row_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_instance_type(&self, row_id: &str, instance_type: &str) -> ApiResult<()> {
        sqlx::query(
            "UPDATE instances SET instance_type = ?, hourly_cost = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(instance_type)
        .bind(super::pricing::instance_hourly_cost(instance_type))
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_instance_live_metrics(
        &self,
        row_id: &str,
        cpu: f64,
        memory: f64,
    ) -> ApiResult<()> {
        sqlx::query(
            "UPDATE instances SET current_cpu = ?, current_memory = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(cpu)
        .bind(memory)
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_asg_capacity(
        &self,
        row_id: &str,
        min_size: i64,
        max_size: i64,
        desired_capacity: i64,
    ) -> ApiResult<()> {
        sqlx::query(
            "UPDATE autoscaling_groups SET min_size = ?, max_size = ?, desired_capacity = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(min_size)
        .bind(max_size)
        .bind(desired_capacity)
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_asg_utilization(&self, row_id: &str, utilization: f64) -> ApiResult<()> {
        sqlx::query(
            "UPDATE autoscaling_groups SET current_utilization = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(utilization)
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_elastic_ip(&self, row_id: &str) -> ApiResult<()> {
        sqlx::query("DELETE FROM elastic_ips WHERE id = ?")
            .bind(row_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn orphan_elastic_ip(&self, row_id: &str) -> ApiResult<()> {
        sqlx::query(
            "UPDATE elastic_ips SET associated_instance_id = NULL, state = 'unassociated', updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_volume_state(&self, row_id: &str, state: &str) -> ApiResult<()> {
        sqlx::query("UPDATE volumes SET state = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(state)
            .bind(row_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_volume_type(&self, row_id: &str, volume_type: &str) -> ApiResult<()> {
        sqlx::query(
            "UPDATE volumes SET volume_type = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(volume_type)
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_snapshot(&self, row_id: &str) -> ApiResult<()> {
        sqlx::query("DELETE FROM snapshots WHERE id = ?")
            .bind(row_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_bucket_lifecycle_rules(
        &self,
        row_id: &str,
        rules: &[LifecycleRule],
    ) -> ApiResult<()> {
        sqlx::query(
            "UPDATE s3_buckets SET lifecycle_rules = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(Json(rules))
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_log_group_retention(&self, row_id: &str, days: i64) -> ApiResult<()> {
        sqlx::query(
            "UPDATE log_groups SET retention_in_days = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(days)
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_rds_state(&self, row_id: &str, state: &str) -> ApiResult<()> {
        sqlx::query(
            "UPDATE rds_instances SET state = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(state)
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_rds_class(&self, row_id: &str, instance_class: &str) -> ApiResult<()> {
        sqlx::query(
            "UPDATE rds_instances SET instance_class = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(instance_class)
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_rds_multi_az(&self, row_id: &str, multi_az: bool) -> ApiResult<()> {
        sqlx::query(
            "UPDATE rds_instances SET multi_az = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(multi_az)
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_cache_cluster(&self, row_id: &str) -> ApiResult<()> {
        sqlx::query("DELETE FROM cache_clusters WHERE id = ?")
            .bind(row_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_load_balancer(&self, row_id: &str) -> ApiResult<()> {
        sqlx::query("DELETE FROM load_balancers WHERE id = ?")
            .bind(row_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_lambda_function(&self, row_id: &str) -> ApiResult<()> {
        sqlx::query("DELETE FROM lambda_functions WHERE id = ?")
            .bind(row_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_lambda_memory(&self, row_id: &str, memory_mb: i64) -> ApiResult<()> {
        sqlx::query(
            "UPDATE lambda_functions SET memory_mb = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(memory_mb)
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_lambda_timeout(&self, row_id: &str, timeout_seconds: i64) -> ApiResult<()> {
        sqlx::query(
            "UPDATE lambda_functions SET timeout_seconds = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(timeout_seconds)
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Inserts (drift-engine scenario injection and test seeding)
    // ------------------------------------------------------------------

    pub async fn insert_instance(&self, row: &Instance) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO instances (id, account_id, region, env, tags, instance_id, instance_type, state, hourly_cost, avg_cpu_7d, current_cpu, current_memory, autoscaling_group_id, launch_time)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.account_id)
        .bind(&row.region)
        .bind(&row.env)
        .bind(&row.tags)
        .bind(&row.instance_id)
        .bind(&row.instance_type)
        .bind(&row.state)
        .bind(row.hourly_cost)
        .bind(row.avg_cpu_7d)
        .bind(row.current_cpu)
        .bind(row.current_memory)
        .bind(&row.autoscaling_group_id)
        .bind(row.launch_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_autoscaling_group(&self, row: &AutoscalingGroup) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO autoscaling_groups (id, account_id, region, env, tags, name, instance_type, min_size, max_size, desired_capacity, current_utilization)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.account_id)
        .bind(&row.region)
        .bind(&row.env)
        .bind(&row.tags)
        .bind(&row.name)
        .bind(&row.instance_type)
        .bind(row.min_size)
        .bind(row.max_size)
        .bind(row.desired_capacity)
        .bind(row.current_utilization)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_rds_instance(&self, row: &RdsInstance) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO rds_instances (id, account_id, region, env, tags, db_instance_id, instance_class, engine, state, multi_az, avg_cpu_7d, avg_connections_7d)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.account_id)
        .bind(&row.region)
        .bind(&row.env)
        .bind(&row.tags)
        .bind(&row.db_instance_id)
        .bind(&row.instance_class)
        .bind(&row.engine)
        .bind(&row.state)
        .bind(row.multi_az)
        .bind(row.avg_cpu_7d)
        .bind(row.avg_connections_7d)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_cache_cluster(&self, row: &CacheCluster) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO cache_clusters (id, account_id, region, env, tags, cluster_id, node_type, num_nodes, avg_cpu_7d, avg_connections_7d)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.account_id)
        .bind(&row.region)
        .bind(&row.env)
        .bind(&row.tags)
        .bind(&row.cluster_id)
        .bind(&row.node_type)
        .bind(row.num_nodes)
        .bind(row.avg_cpu_7d)
        .bind(row.avg_connections_7d)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_load_balancer(&self, row: &LoadBalancer) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO load_balancers (id, account_id, region, env, tags, lb_arn, name, lb_type, target_count, healthy_target_count, avg_request_count_7d)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.account_id)
        .bind(&row.region)
        .bind(&row.env)
        .bind(&row.tags)
        .bind(&row.lb_arn)
        .bind(&row.name)
        .bind(&row.lb_type)
        .bind(row.target_count)
        .bind(row.healthy_target_count)
        .bind(row.avg_request_count_7d)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_lambda_function(&self, row: &LambdaFunction) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO lambda_functions (id, account_id, region, env, tags, name, memory_mb, timeout_seconds, invocations_7d, avg_duration_ms_7d, avg_memory_used_mb_7d)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.account_id)
        .bind(&row.region)
        .bind(&row.env)
        .bind(&row.tags)
        .bind(&row.name)
        .bind(row.memory_mb)
        .bind(row.timeout_seconds)
        .bind(row.invocations_7d)
        .bind(row.avg_duration_ms_7d)
        .bind(row.avg_memory_used_mb_7d)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_volume(&self, row: &Volume) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO volumes (id, account_id, region, env, tags, volume_id, volume_type, size_gib, state, attached_instance_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.account_id)
        .bind(&row.region)
        .bind(&row.env)
        .bind(&row.tags)
        .bind(&row.volume_id)
        .bind(&row.volume_type)
        .bind(row.size_gib)
        .bind(&row.state)
        .bind(&row.attached_instance_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_snapshot(&self, row: &Snapshot) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO snapshots (id, account_id, region, env, tags, snapshot_id, source_volume_id, size_gib, retention_policy, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.account_id)
        .bind(&row.region)
        .bind(&row.env)
        .bind(&row.tags)
        .bind(&row.snapshot_id)
        .bind(&row.source_volume_id)
        .bind(row.size_gib)
        .bind(&row.retention_policy)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_s3_bucket(&self, row: &S3Bucket) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO s3_buckets (id, account_id, region, env, tags, name, versioning_enabled, lifecycle_rules)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.account_id)
        .bind(&row.region)
        .bind(&row.env)
        .bind(&row.tags)
        .bind(&row.name)
        .bind(row.versioning_enabled)
        .bind(&row.lifecycle_rules)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_log_group(&self, row: &LogGroup) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO log_groups (id, account_id, region, env, tags, name, retention_days, retention_in_days)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.account_id)
        .bind(&row.region)
        .bind(&row.env)
        .bind(&row.tags)
        .bind(&row.name)
        .bind(row.retention_days)
        .bind(row.retention_in_days)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_elastic_ip(&self, row: &ElasticIp) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO elastic_ips (id, account_id, region, env, tags, allocation_id, public_ip, associated_instance_id, state)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.account_id)
        .bind(&row.region)
        .bind(&row.env)
        .bind(&row.tags)
        .bind(&row.allocation_id)
        .bind(&row.public_ip)
        .bind(&row.associated_instance_id)
        .bind(&row.state)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
