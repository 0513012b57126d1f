use sea_orm::sea_query::{OnConflict, TableCreateStatement};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, EntityTrait,
    Schema, Set, Statement,
};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::entity::{account, account_role, class, department, major, role, work_department};

/// Roles every installation starts with: (code, display name)
const SEED_ROLES: &[(&str, &str)] = &[
    (role::ROLE_ADMIN, "管理员"),
    (role::ROLE_READER, "读者"),
];

/// Initialize database connection, auto-migrate tables and seed roles
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let db = connect(config).await?;

    auto_migrate(&db).await?;
    seed_roles(&db).await?;

    Ok(db)
}

/// Open a connection pool without touching the schema
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let database_url = config.connection_url();

    info!(
        "Connecting to database: {} {}:{}/{}",
        config.db_type, config.host, config.port, config.name
    );

    let mut opt = ConnectOptions::new(&database_url);
    if config.db_type == "sqlite" {
        // One connection: an in-memory sqlite database lives and dies with it
        opt.max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);
    } else {
        opt.max_connections(100)
            .min_connections(5)
            .connect_timeout(Duration::from_secs(8))
            .acquire_timeout(Duration::from_secs(8))
            .idle_timeout(Duration::from_secs(8))
            .max_lifetime(Duration::from_secs(8))
            .sqlx_logging(true)
            .sqlx_logging_level(tracing::log::LevelFilter::Debug)
            .set_schema_search_path("public");
    }

    let db = Database::connect(opt).await?;
    info!("Database connection established");

    Ok(db)
}

/// Whether the database answers a ping
pub async fn ping(db: &DatabaseConnection) -> bool {
    match db.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Database ping failed: {}", e);
            false
        }
    }
}

/// Auto-migrate database tables
pub async fn auto_migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    info!("Running auto-migration for all entities...");

    // Create tables in dependency order
    let tables = [
        // 1. Independent tables first
        schema.create_table_from_entity(department::Entity),
        schema.create_table_from_entity(work_department::Entity),
        schema.create_table_from_entity(role::Entity),
        // 2. Tables referencing other tables
        schema.create_table_from_entity(major::Entity),
        schema.create_table_from_entity(class::Entity),
        schema.create_table_from_entity(account::Entity),
        schema.create_table_from_entity(account_role::Entity),
    ];
    for stmt in tables {
        create_table_if_not_exists(db, backend, stmt).await?;
    }

    info!("Auto-migration completed successfully");
    Ok(())
}

/// Insert the built-in roles, leaving existing ones untouched
pub async fn seed_roles<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    let models = SEED_ROLES.iter().map(|(code, name)| role::ActiveModel {
        code: Set(code.to_string()),
        name: Set(name.to_string()),
        ..Default::default()
    });

    let inserted = role::Entity::insert_many(models)
        .on_conflict(OnConflict::column(role::Column::Code).do_nothing().to_owned())
        .exec_without_returning(db)
        .await?;

    if inserted > 0 {
        info!("Seeded {} built-in roles", inserted);
    }
    Ok(())
}

/// Create a table if it doesn't exist
async fn create_table_if_not_exists(
    db: &DatabaseConnection,
    backend: DbBackend,
    mut stmt: TableCreateStatement,
) -> Result<(), DbErr> {
    // Add IF NOT EXISTS to avoid errors when table already exists
    stmt.if_not_exists();

    let sql = backend.build(&stmt);

    db.execute(Statement::from_string(backend, sql.to_string())).await?;

    Ok(())
}
