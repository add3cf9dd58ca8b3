use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tracing::{debug, info};

use db::DbHandle;

use crate::config::{LockBackend, PairingConfig};
use crate::contract::client::PairingApi;
use crate::domain::repo::{CoupleLocks, SharedDataPurger};
use crate::domain::service::{Service, ServiceConfig, Stores};
use crate::gateways::local::PairingLocalClient;
use crate::infra::locks::{DbCoupleLocks, LocalCoupleLocks};
use crate::infra::storage::sea_orm_repo::{
    SeaOrmCoupleRepository, SeaOrmMatchRequestRepository, SeaOrmPurgeJournal,
    SeaOrmUsersRepository,
};
use crate::infra::storage::shared_data::{SeaOrmCoupleEvents, SeaOrmCouplePhotos};

/// The wired pairing subsystem: SeaORM storage, the configured lock backend,
/// the domain service and its in-process client.
pub struct PairingModule {
    service: Arc<Service>,
    events: Arc<SeaOrmCoupleEvents<DatabaseConnection>>,
    photos: Arc<SeaOrmCouplePhotos<DatabaseConnection>>,
}

impl PairingModule {
    pub fn init(db: Arc<DbHandle>, cfg: &PairingConfig) -> anyhow::Result<Self> {
        info!("Initializing pairing module");
        debug!(
            "Loaded pairing config: default_page_size={}, max_page_size={}, lock_backend={:?}",
            cfg.default_page_size, cfg.max_page_size, cfg.lock_backend
        );
        if cfg.default_page_size == 0 || cfg.max_page_size < cfg.default_page_size {
            anyhow::bail!(
                "invalid paging config: default_page_size={} max_page_size={}",
                cfg.default_page_size,
                cfg.max_page_size
            );
        }

        let conn = db.sea();
        let stores = Stores {
            users: Arc::new(SeaOrmUsersRepository::new(conn.clone())),
            requests: Arc::new(SeaOrmMatchRequestRepository::new(conn.clone())),
            couples: Arc::new(SeaOrmCoupleRepository::new(conn.clone())),
            journal: Arc::new(SeaOrmPurgeJournal::new(conn.clone())),
        };

        let events = Arc::new(SeaOrmCoupleEvents::new(conn.clone()));
        let photos = Arc::new(SeaOrmCouplePhotos::new(conn));
        // purge order: events, then photos
        let purgers: Vec<Arc<dyn SharedDataPurger>> = vec![
            events.clone() as Arc<dyn SharedDataPurger>,
            photos.clone() as Arc<dyn SharedDataPurger>,
        ];

        let max_wait = Duration::from_millis(cfg.lock_max_wait_ms);
        let locks: Arc<dyn CoupleLocks> = match cfg.lock_backend {
            LockBackend::Local => Arc::new(LocalCoupleLocks::new(max_wait)),
            LockBackend::Database => Arc::new(DbCoupleLocks::new(db, max_wait)),
        };

        let service_config = ServiceConfig {
            default_page_size: cfg.default_page_size,
            max_page_size: cfg.max_page_size,
            max_message_length: cfg.max_message_length,
        };
        let service = Service::new(stores, purgers, locks, service_config);

        Ok(Self {
            service: Arc::new(service),
            events,
            photos,
        })
    }

    pub async fn migrate(db: &DbHandle) -> anyhow::Result<()> {
        info!("Running pairing database migrations");
        crate::infra::storage::migrations::Migrator::up(db.seaorm(), None).await?;
        info!("Pairing database migrations completed successfully");
        Ok(())
    }

    /// Local in-process client for other modules and the admin CLI.
    pub fn client(&self) -> Arc<dyn PairingApi> {
        Arc::new(PairingLocalClient::new(self.service.clone()))
    }

    pub fn service(&self) -> Arc<Service> {
        self.service.clone()
    }

    /// Calendar events store. Writes need a guard from `lock_couple_for_write`.
    pub fn events(&self) -> Arc<SeaOrmCoupleEvents<DatabaseConnection>> {
        self.events.clone()
    }

    /// Photo metadata store. Writes need a guard from `lock_couple_for_write`.
    pub fn photos(&self) -> Arc<SeaOrmCouplePhotos<DatabaseConnection>> {
        self.photos.clone()
    }
}
