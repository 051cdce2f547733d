/// Business logic for blog-service
///
/// Services wrap the repository port with the rules handlers rely on:
/// feed paging, follow graph no-ops, author attribution and accounts.
/// Mail delivery for password resets lives here too.
pub mod accounts;
pub mod email;
pub mod feed;
pub mod follow;
pub mod media;
pub mod password;
pub mod posts;

pub use accounts::AccountService;
pub use email::EmailService;
pub use feed::FeedService;
pub use follow::FollowService;
pub use media::MediaStore;
pub use posts::PostService;
