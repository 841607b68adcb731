pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod scheduler;
pub mod store;

pub use db::DbPool;

use std::sync::Arc;

use auth::{AuthService, AuthStores};
use config::Config;
use scheduler::BookingScheduler;
use store::{
    BookingStore, RoomStore, SqliteBookingStore, SqlitePermissionStore, SqliteRoleStore,
    SqliteRoomStore, SqliteRouteStore, SqliteScopeStore, SqliteUserStore, UserStore,
};

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub scheduler: BookingScheduler,
    pub auth: AuthService,
    pub rooms: Arc<dyn RoomStore>,
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let policy = config.scheduler.boundary_policy;

        let bookings: Arc<dyn BookingStore> =
            Arc::new(SqliteBookingStore::new(db.clone(), policy));
        let rooms: Arc<dyn RoomStore> = Arc::new(SqliteRoomStore::new(db.clone()));
        let users: Arc<dyn UserStore> = Arc::new(SqliteUserStore::new(db.clone()));

        let auth = AuthService::new(
            config.auth.clone(),
            AuthStores {
                users: users.clone(),
                rooms: rooms.clone(),
                bookings: bookings.clone(),
                roles: Arc::new(SqliteRoleStore::new(db.clone())),
                routes: Arc::new(SqliteRouteStore::new(db.clone())),
                scopes: Arc::new(SqliteScopeStore::new(db.clone())),
                permissions: Arc::new(SqlitePermissionStore::new(db.clone())),
            },
        );
        let scheduler = BookingScheduler::new(bookings, policy);

        Self {
            config,
            db,
            scheduler,
            auth,
            rooms,
            users,
        }
    }
}
