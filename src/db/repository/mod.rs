pub mod account;
pub mod collection;
pub mod grant;
pub mod settings;
pub mod share_offer;
pub mod subscription;

pub use account::AccountRepository;
pub use collection::{CollectionRepository, ItemRepository};
pub use grant::GrantRepository;
pub use settings::SettingsRepository;
pub use share_offer::ShareOfferRepository;
pub use subscription::SubscriptionRepository;
