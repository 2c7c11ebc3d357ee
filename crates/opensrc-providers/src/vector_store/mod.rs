pub mod edgevec;
