pub mod svix;
