pub mod eyeriss;
