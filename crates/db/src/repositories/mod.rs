//! Repository layer: one zero-sized struct per table with async
//! associated functions taking a `&PgPool`.

pub mod activity_repo;
pub mod challenge_repo;
pub mod club_member_repo;
pub mod conversion_rate_repo;
pub mod participation_repo;
pub mod profile_repo;

pub use activity_repo::ActivityRepo;
pub use challenge_repo::ChallengeRepo;
pub use club_member_repo::ClubMemberRepo;
pub use conversion_rate_repo::ConversionRateRepo;
pub use participation_repo::ParticipationRepo;
pub use profile_repo::ProfileRepo;
